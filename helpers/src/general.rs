use std::cmp::Ordering;
use std::error::Error;
use std::fmt;

/// InputValueError is used if some replay option or input value does not fulfill the posed
/// requirements, e.g., a non-positive replay speed.
#[derive(Debug, Clone)]
pub struct InputValueError {
    pub what: String,
}

impl InputValueError {
    pub fn new(what: &str) -> InputValueError {
        InputValueError {
            what: what.to_owned(),
        }
    }
}

impl fmt::Display for InputValueError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid input value: {}", self.what)
    }
}

impl Error for InputValueError {}

#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// argsort returns the indices that would sort an array. Incomparable values (NaN) are moved to
/// the end in either order, and the sort is stable, so equal values keep their input order.
pub fn argsort<T: PartialOrd>(x: &[T], order: SortOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..x.len()).collect();
    indices.sort_by(|&a, &b| match (is_incomparable(&x[a]), is_incomparable(&x[b])) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match order {
            SortOrder::Ascending => x[a].partial_cmp(&x[b]).unwrap_or(Ordering::Equal),
            SortOrder::Descending => x[b].partial_cmp(&x[a]).unwrap_or(Ordering::Equal),
        },
    });
    indices
}

fn is_incomparable<T: PartialOrd>(val: &T) -> bool {
    val.partial_cmp(val).is_none()
}

/// fmt_gap formats a gap in seconds the way timing screens show it, e.g. "+1.234".
pub fn fmt_gap(gap: Option<f64>) -> String {
    match gap {
        Some(g) if g.is_finite() => format!("{:+.3}", g),
        _ => String::from("-"),
    }
}
