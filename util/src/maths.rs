//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Evaluate a polynomial at `value`.
///
/// Coefficients are ordered lowest power first, so `coeffs[i]` multiplies `value^i`.
pub fn poly_val<T>(value: T, coeffs: &[T]) -> T
where
    T: Float
{
    coeffs.iter().rev().fold(T::zero(), |acc, &c| acc * value + c)
}

/// Coefficients of the derivative of the given polynomial, using the same ordering as
/// [`poly_val`].
pub fn poly_der<T>(coeffs: &[T]) -> Vec<T>
where
    T: Float
{
    coeffs.iter()
        .enumerate()
        .skip(1)
        .map(|(i, &c)| c * T::from(i).unwrap_or_else(T::zero))
        .collect()
}

/// Largest absolute element-wise difference between two points, or `None` if the dimentions do
/// not match.
pub fn max_abs_diff<T>(point_0: &[T], point_1: &[T]) -> Option<T>
where
    T: Float
{
    if point_0.len() != point_1.len() {
        return None;
    }

    Some(point_0.iter()
        .zip(point_1.iter())
        .fold(T::zero(), |max, (&a, &b)| max.max((a - b).abs())))
}

pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: Float
{
    value.max(min).min(max)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_poly_val() {
        // 1 + 2x + 3x^2
        let coeffs = [1.0, 2.0, 3.0];

        assert_eq!(poly_val(0.0, &coeffs), 1.0);
        assert_eq!(poly_val(2.0, &coeffs), 17.0);
        assert_eq!(poly_val(2.0, &poly_der(&coeffs)), 14.0);
        assert_eq!(poly_der(&poly_der(&coeffs)), vec![6.0]);
        assert_eq!(poly_val(1.0, &[] as &[f64]), 0.0);
    }

    #[test]
    fn test_max_abs_diff() {
        assert_eq!(max_abs_diff(&[0.0], &[3.0, 4.0]), None);
        assert_eq!(max_abs_diff(&[0.0, 1.0], &[-3.0, 2.0]), Some(3.0));
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(2.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.5, -1.0, 1.0), 0.5);
    }
}
