use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use num_traits::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use separator::Separatable;

use crate::core::{GenericError, GenericResult};

pub const PAISA_PER_RUPEE: i64 = 100;
const BASIS_POINTS_PER_UNIT: i64 = 10_000;

/// An amount of Nepalese rupees held as an integer count of paisa.
///
/// All accounting arithmetic happens on this type. Floating point and `Decimal` are allowed only
/// at I/O boundaries (CSV parsing, config, display); they never enter a calculation that feeds
/// back into the books.
///
/// Divisions round half-to-even so that repeated divisions don't drift positively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Money(i64);

impl Money {
    pub fn from_paisa(paisa: i64) -> Money {
        Money(paisa)
    }

    pub fn from_rupees(rupees: Decimal) -> GenericResult<Money> {
        let paisa = (rupees * Decimal::from(PAISA_PER_RUPEE))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);

        Ok(Money(paisa.to_i64().ok_or_else(|| format!(
            "Invalid money amount: {rupees}"))?))
    }

    pub fn zero() -> Money {
        Money(0)
    }

    pub fn paisa(self) -> i64 {
        self.0
    }

    pub fn to_rupees(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn multiply(self, count: i64) -> Money {
        // Inputs are bounded (per-share prices and share counts both fit 10^9), so overflow here
        // is a detected bug, not an input error.
        Money(self.0.checked_mul(count).unwrap())
    }

    pub fn divide(self, count: i64) -> Money {
        assert!(count > 0, "division of money by a non-positive share count");
        Money(div_round_half_even(self.0, count))
    }

    pub fn scale_by_basis_points(self, basis_points: i32) -> Money {
        let scaled = div_round_half_even_i128(
            i128::from(self.0) * i128::from(basis_points),
            i128::from(BASIS_POINTS_PER_UNIT));
        Money(i64::try_from(scaled).unwrap())
    }

    /// Relative change from `old` to `new` in basis points (10,000 bp = 100%).
    ///
    /// When `old` is zero the change is undefined; zero is returned and the caller decides the
    /// semantics.
    pub fn percent_change(old: Money, new: Money) -> i32 {
        if old.0 == 0 {
            return 0;
        }

        let basis_points =
            i128::from(new.0 - old.0) * i128::from(BASIS_POINTS_PER_UNIT) / i128::from(old.0);
        cast::i32(i64::try_from(basis_points).unwrap()).unwrap()
    }

    pub fn abs(self) -> Money {
        Money(self.0.abs())
    }

    pub fn signum(self) -> i64 {
        self.0.signum()
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

fn div_round_half_even(numerator: i64, denominator: i64) -> i64 {
    i64::try_from(div_round_half_even_i128(i128::from(numerator), i128::from(denominator))).unwrap()
}

// Round half to even for a positive denominator: floor division, then round the remainder,
// breaking ties towards the even neighbor.
fn div_round_half_even_i128(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);

    let quotient = numerator.div_euclid(denominator);
    let remainder = numerator.rem_euclid(denominator);

    match (remainder * 2).cmp(&denominator) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => if quotient % 2 == 0 {
            quotient
        } else {
            quotient + 1
        },
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item=Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

impl FromStr for Money {
    type Err = GenericError;

    fn from_str(string: &str) -> GenericResult<Money> {
        let rupees = Decimal::from_str(string).map_err(|_| format!(
            "Invalid money amount: {string:?}"))?;
        Money::from_rupees(rupees)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sign = if self.0 < 0 {
            "-"
        } else {
            ""
        };

        let paisa = self.0.unsigned_abs();
        let rupees = i64::try_from(paisa / 100).unwrap();
        write!(f, "{}{}.{:02}", sign, rupees.separated_string(), paisa % 100)
    }
}
