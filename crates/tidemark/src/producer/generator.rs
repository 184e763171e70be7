use crate::error::{Error, GeneratorError, Result};

/// Produces one item per step for a single producer.
///
/// A generator is owned by exactly one producer thread and is only ever called
/// from it, with steps in increasing order starting at zero. Returning an
/// error ends that producer early; nothing is pushed for the failed step.
pub trait Generator<T>: Send {
    /// Produces the item for `step` of producer `producer`.
    fn generate(&mut self, producer: usize, step: u64) -> Result<T, GeneratorError>;
}

impl<T, G> Generator<T> for Box<G>
where
    G: Generator<T> + ?Sized,
{
    fn generate(&mut self, producer: usize, step: u64) -> Result<T, GeneratorError> {
        (**self).generate(producer, step)
    }
}

/// A [`Generator`] backed by a closure. Built with [`generator_fn`].
#[derive(Clone, Debug)]
pub struct FnGenerator<F> {
    f: F,
}

/// Wraps a closure `(producer, step) -> Result<item, GeneratorError>` as a
/// [`Generator`].
///
/// # Example
/// ```
/// use tidemark::{Generator, generator_fn};
///
/// let mut squares = generator_fn(|_, step| Ok(step * step));
/// assert_eq!(squares.generate(0, 4).unwrap(), 16);
/// ```
pub fn generator_fn<T, F>(f: F) -> FnGenerator<F>
where
    F: FnMut(usize, u64) -> Result<T, GeneratorError> + Send,
{
    FnGenerator { f }
}

impl<T, F> Generator<T> for FnGenerator<F>
where
    F: FnMut(usize, u64) -> Result<T, GeneratorError> + Send,
{
    fn generate(&mut self, producer: usize, step: u64) -> Result<T, GeneratorError> {
        (self.f)(producer, step)
    }
}

/// Emits `label` on every positive step divisible by `multiple`, and an empty
/// token on every other step.
///
/// This is the classic "Fizz every 3" rule: `LabelEvery::new(3, "Fizz")`
/// yields `"", "", "", "Fizz", "", "", "Fizz", ...` for steps `0, 1, 2, ...`.
/// Step zero only matches after [`matching_zero`], since zero is a multiple of
/// everything.
///
/// [`matching_zero`]: Self::matching_zero
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelEvery {
    multiple: u64,
    label: String,
    match_zero: bool,
}

impl LabelEvery {
    /// # Errors
    ///
    /// Returns [`Error::InvalidMultiple`] if `multiple` is zero.
    pub fn new(multiple: u64, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if multiple == 0 {
            return Err(Error::InvalidMultiple { label });
        }
        Ok(Self {
            multiple,
            label,
            match_zero: false,
        })
    }

    /// Also emits the label on step zero.
    #[must_use]
    pub fn matching_zero(mut self) -> Self {
        self.match_zero = true;
        self
    }

    pub const fn multiple(&self) -> u64 {
        self.multiple
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Generator<String> for LabelEvery {
    fn generate(&mut self, _producer: usize, step: u64) -> Result<String, GeneratorError> {
        if step % self.multiple == 0 && (step != 0 || self.match_zero) {
            Ok(self.label.clone())
        } else {
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_every_matches_multiples() {
        let mut fizz = LabelEvery::new(3, "Fizz").unwrap();
        let items: Vec<_> = (0..7).map(|step| fizz.generate(0, step).unwrap()).collect();
        assert_eq!(items, ["", "", "", "Fizz", "", "", "Fizz"]);
    }

    #[test]
    fn label_every_matching_zero_labels_first_step() {
        let mut fizz = LabelEvery::new(3, "Fizz").unwrap().matching_zero();
        assert_eq!(fizz.generate(0, 0).unwrap(), "Fizz");
        assert_eq!(fizz.generate(0, 1).unwrap(), "");
    }

    #[test]
    fn label_every_one_always_matches() {
        let mut x = LabelEvery::new(1, "X").unwrap().matching_zero();
        assert!((0..10).all(|step| x.generate(0, step).unwrap() == "X"));

        let mut positive = LabelEvery::new(1, "X").unwrap();
        assert_eq!(positive.generate(0, 0).unwrap(), "");
        assert!((1..10).all(|step| positive.generate(0, step).unwrap() == "X"));
    }

    #[test]
    fn label_every_rejects_zero_multiple() {
        assert!(matches!(
            LabelEvery::new(0, "Never"),
            Err(Error::InvalidMultiple { label }) if label == "Never"
        ));
    }

    #[test]
    fn closures_and_boxes_generate() {
        let mut boxed: Box<dyn Generator<u64>> =
            Box::new(generator_fn(|producer, step| Ok(producer as u64 * 100 + step)));
        assert_eq!(boxed.generate(2, 5).unwrap(), 205);

        let mut failing = generator_fn(|_, step| {
            if step < 2 {
                Ok(step)
            } else {
                Err(GeneratorError::new("exhausted"))
            }
        });
        assert_eq!(failing.generate(0, 1), Ok(1));
        assert_eq!(failing.generate(0, 2).unwrap_err().reason(), "exhausted");
    }
}
