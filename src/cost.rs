/// Assigns an integer weight to a buffered item for capacity accounting.
///
/// Any `Fn(&T) -> u64` closure is a cost assigner as well, which keeps
/// one-off cost functions out of the type zoo.
pub trait CostAssigner<T>: Send + Sync {
    fn cost(&self, item: &T) -> u64;
}

/// Cost of a string is its length in bytes.
///
/// This is an estimate of memory usage rather than an exact figure: it does
/// not account for allocation overhead.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringLengthCostAssigner;

impl<S: AsRef<str>> CostAssigner<S> for StringLengthCostAssigner {
    fn cost(&self, item: &S) -> u64 {
        item.as_ref().len() as u64
    }
}

impl<T, F> CostAssigner<T> for F
where
    F: Fn(&T) -> u64 + Send + Sync,
{
    fn cost(&self, item: &T) -> u64 {
        self(item)
    }
}
