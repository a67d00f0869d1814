/// A quantity as `significand × 10^exponent`, with the trailing zeros of the
/// significand folded into the exponent. Equal values have equal fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Decimal {
	/// Digits of the value, without trailing zeros.
	significand: i128,
	/// Power of ten the significand is scaled by.
	exponent: i32,
}

/// Whether both strings are quantities with the same value. Strings that do
/// not parse, or are too large to compare exactly, are never equal here.
pub fn same_value(left: &str, right: &str) -> bool {
	match (parse(left), parse(right)) {
		(Some(left), Some(right)) => left == right,
		_ => false,
	}
}

/// Parses `<number><suffix>`, where the suffix is a binary SI suffix (`Ki`
/// to `Ei`), a decimal SI suffix (`n` to `E`) or a decimal exponent (`e3`,
/// `E-2`).
fn parse(text: &str) -> Option<Decimal> {
	let text = text.trim();
	let number_end = text
		.find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
		.unwrap_or(text.len());
	let (number, suffix) = text.split_at(number_end);

	let (negative, number) = match number.strip_prefix('-') {
		Some(rest) => (true, rest),
		None => (false, number.strip_prefix('+').unwrap_or(number)),
	};
	let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
	if (whole.is_empty() && fraction.is_empty()) ||
		!whole
			.chars()
			.chain(fraction.chars())
			.all(|c| c.is_ascii_digit())
	{
		return None;
	}

	let mut significand = format!("{}{}", whole, fraction).parse::<i128>().ok()?;
	let (power_of_ten, power_of_two) = match suffix {
		"" => (0, 0),
		"n" => (-9, 0),
		"u" => (-6, 0),
		"m" => (-3, 0),
		"k" => (3, 0),
		"M" => (6, 0),
		"G" => (9, 0),
		"T" => (12, 0),
		"P" => (15, 0),
		"E" => (18, 0),
		"Ki" => (0, 10),
		"Mi" => (0, 20),
		"Gi" => (0, 30),
		"Ti" => (0, 40),
		"Pi" => (0, 50),
		"Ei" => (0, 60),
		exponent => {
			let digits = exponent
				.strip_prefix('e')
				.or_else(|| exponent.strip_prefix('E'))?;
			(digits.parse::<i32>().ok()?, 0)
		}
	};

	significand = significand.checked_mul(1i128.checked_shl(power_of_two)?)?;
	if negative {
		significand = -significand;
	}
	let mut exponent = power_of_ten.checked_sub(i32::try_from(fraction.len()).ok()?)?;

	if significand == 0 {
		return Some(Decimal {
			significand: 0,
			exponent: 0,
		});
	}
	while significand % 10 == 0 {
		significand /= 10;
		exponent = exponent.checked_add(1)?;
	}

	Some(Decimal {
		significand,
		exponent,
	})
}
