//! Cubic spline interpolation through measured curve points.
//!
//! Each segment between two points is a cubic whose end slopes come from the
//! neighbouring points. Repeating a point forces a straight line or a zero
//! second derivative at that end, which is how the measured cutoff curves
//! express their endpoints and discontinuities.

/// Curve point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Input coordinate
    pub x: f64,
    /// Output coordinate
    pub y: f64,
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point { x, y }
    }
}

/// Coefficients of `y = ((a*x + b)*x + c)*x + d`
fn cubic_coefficients(p1: Point, p2: Point, k1: f64, k2: f64) -> (f64, f64, f64, f64) {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let a = ((k1 + k2) - 2.0 * dy / dx) / (dx * dx);
    let b = ((k2 - k1) / dx - 3.0 * (p1.x + p2.x) * a) / 2.0;
    let c = k1 - (3.0 * p1.x * a + 2.0 * b) * p1.x;
    let d = p1.y - ((p1.x * a + b) * p1.x + c) * p1.x;
    (a, b, c, d)
}

/// Evaluate the spline through `points` in steps of `res`, calling `plot`
/// for every evaluated position
///
/// The first and last points must be repeated.
pub fn interpolate<F: FnMut(f64, f64)>(points: &[Point], res: f64, mut plot: F) {
    for w in points.windows(4) {
        let (p0, p1, p2, p3) = (w[0], w[1], w[2], w[3]);

        // p1 and p2 equal; single point.
        if p1.x == p2.x {
            continue;
        }

        let (k1, k2) = if p0.x == p1.x && p2.x == p3.x {
            // Both ends repeated; straight line.
            let k = (p2.y - p1.y) / (p2.x - p1.x);
            (k, k)
        } else if p0.x == p1.x {
            // f''(x1) = 0
            let k2 = (p3.y - p1.y) / (p3.x - p1.x);
            let k1 = (3.0 * (p2.y - p1.y) / (p2.x - p1.x) - k2) / 2.0;
            (k1, k2)
        } else if p2.x == p3.x {
            // f''(x2) = 0
            let k1 = (p2.y - p0.y) / (p2.x - p0.x);
            let k2 = (3.0 * (p2.y - p1.y) / (p2.x - p1.x) - k1) / 2.0;
            (k1, k2)
        } else {
            (
                (p2.y - p0.y) / (p2.x - p0.x),
                (p3.y - p1.y) / (p3.x - p1.x),
            )
        };

        let (a, b, c, d) = cubic_coefficients(p1, p2, k1, k2);
        let mut x = p1.x;
        while x <= p2.x {
            plot(x, ((a * x + b) * x + c) * x + d);
            x += res;
        }
    }
}

/// Tabulate a spline at integer positions `0..len`
///
/// Negative values are clamped to zero.
pub fn tabulate(points: &[Point], len: usize) -> Vec<i32> {
    let mut table = vec![0i32; len];
    interpolate(points, 1.0, |x, y| {
        let index = x as usize;
        if index < len {
            table[index] = y.max(0.0).round() as i32;
        }
    });
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(raw: &[(f64, f64)]) -> Vec<Point> {
        raw.iter().copied().map(Point::from).collect()
    }

    #[test]
    fn test_passes_through_points() {
        let pts = points(&[
            (0.0, 0.0),
            (0.0, 0.0),
            (10.0, 100.0),
            (20.0, 150.0),
            (30.0, 300.0),
            (30.0, 300.0),
        ]);
        let table = tabulate(&pts, 31);
        assert_eq!(table[0], 0);
        assert_eq!(table[10], 100);
        assert_eq!(table[20], 150);
        assert_eq!(table[30], 300);
    }

    #[test]
    fn test_straight_line_between_repeated_points() {
        let pts = points(&[(0.0, 0.0), (0.0, 0.0), (100.0, 50.0), (100.0, 50.0)]);
        let table = tabulate(&pts, 101);
        for (x, &y) in table.iter().enumerate() {
            assert!((y - (x as i32) / 2).abs() <= 1);
        }
    }

    #[test]
    fn test_negative_values_clamped() {
        let pts = points(&[(0.0, -10.0), (0.0, -10.0), (10.0, -5.0), (10.0, -5.0)]);
        assert!(tabulate(&pts, 11).iter().all(|&y| y == 0));
    }
}
