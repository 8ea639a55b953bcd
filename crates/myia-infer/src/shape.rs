//! The abstract shape lattice.

use crate::error::InferenceError;
use std::fmt;

/// One dimension of a shape: a known extent, or [`Dim::Anything`] when the
/// dimension's size is not statically known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    Known(u64),
    Anything,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Known(n) => write!(f, "{n}"),
            Dim::Anything => write!(f, "ANYTHING"),
        }
    }
}

impl Dim {
    fn unify(self, other: Dim) -> Result<Dim, (Dim, Dim)> {
        match (self, other) {
            (Dim::Anything, d) | (d, Dim::Anything) => Ok(d),
            (Dim::Known(a), Dim::Known(b)) if a == b => Ok(Dim::Known(a)),
            (a, b) => Err((a, b)),
        }
    }
}

/// The abstract shape of a value: either a rank-and-dims tuple, or
/// [`Shape::Anything`] when even the rank is unknown.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Known(Vec<Dim>),
    Anything,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Anything => write!(f, "ANYTHING"),
            Shape::Known(dims) => {
                write!(f, "(")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{d}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Shape {
    pub const SCALAR: Shape = Shape::Known(Vec::new());

    pub fn rank(&self) -> Option<usize> {
        match self {
            Shape::Known(dims) => Some(dims.len()),
            Shape::Anything => None,
        }
    }

    pub fn element_count(&self) -> Option<u64> {
        match self {
            Shape::Known(dims) => dims.iter().try_fold(1u64, |acc, d| match d {
                Dim::Known(n) => Some(acc * n),
                Dim::Anything => None,
            }),
            Shape::Anything => None,
        }
    }

    /// Drop dimension `axis`, used by `reduce_array`. `axis = Anything`
    /// degrades to a fully-unknown shape one rank lower than `self`, or
    /// `Shape::Anything` if `self`'s own rank is unknown.
    pub fn drop_axis(&self, axis: Dim) -> Shape {
        match (self, axis) {
            (Shape::Anything, _) => Shape::Anything,
            (Shape::Known(dims), Dim::Known(ax)) if (ax as usize) < dims.len() => {
                let mut out = dims.clone();
                out.remove(ax as usize);
                Shape::Known(out)
            }
            (Shape::Known(dims), _) => Shape::Known(vec![Dim::Anything; dims.len().saturating_sub(1)]),
        }
    }

    /// Unify two shapes, used by `assert_same` and by `if_` when the
    /// branch taken is not statically known.
    pub fn assert_same(a: &Shape, b: &Shape) -> Result<Shape, InferenceError> {
        match (a, b) {
            (Shape::Anything, s) | (s, Shape::Anything) => Ok(s.clone()),
            (Shape::Known(da), Shape::Known(db)) => {
                if da.len() != db.len() {
                    return Err(InferenceError::ShapeMismatch {
                        expected: a.to_string(),
                        got: b.to_string(),
                    });
                }
                let mut out = Vec::with_capacity(da.len());
                for (&x, &y) in da.iter().zip(db.iter()) {
                    out.push(x.unify(y).map_err(|_| InferenceError::ShapeMismatch {
                        expected: a.to_string(),
                        got: b.to_string(),
                    })?);
                }
                Ok(Shape::Known(out))
            }
        }
    }

    /// Validate that `from` can broadcast to `to` (used by `distribute`):
    /// every known `from`-dimension must be 1 or equal to the matching
    /// `to`-dimension, unless the `to`-dimension is itself unknown.
    pub fn broadcastable_to(from: &Shape, to: &Shape) -> Result<(), InferenceError> {
        let (Shape::Known(fd), Shape::Known(td)) = (from, to) else {
            return Ok(());
        };
        for (&f, &t) in fd.iter().zip(td.iter()) {
            if let (Dim::Known(f), Dim::Known(t)) = (f, t) {
                if f != 1 && f != t {
                    return Err(InferenceError::ShapeMismatch {
                        expected: to.to_string(),
                        got: from.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unify_prefers_known_dims() {
        let a = Shape::Known(vec![Dim::Known(3), Dim::Anything]);
        let b = Shape::Known(vec![Dim::Anything, Dim::Known(5)]);
        let u = Shape::assert_same(&a, &b).unwrap();
        assert_eq!(u, Shape::Known(vec![Dim::Known(3), Dim::Known(5)]));
    }

    #[test]
    fn unify_rejects_conflicting_known_dims() {
        let a = Shape::Known(vec![Dim::Known(3)]);
        let b = Shape::Known(vec![Dim::Known(4)]);
        assert!(Shape::assert_same(&a, &b).is_err());
    }

    #[test]
    fn drop_axis_on_unknown_axis_blanks_every_remaining_dim() {
        let s = Shape::Known(vec![Dim::Known(3), Dim::Known(4), Dim::Known(5)]);
        let dropped = s.drop_axis(Dim::Anything);
        assert_eq!(dropped, Shape::Known(vec![Dim::Anything, Dim::Anything]));
    }
}
