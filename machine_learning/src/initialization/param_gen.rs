/// Source of initial values for a model's flat parameter buffer.
pub trait ParamGen {
    /// Draws up to `n` values. Fewer than `n` are returned when the generator runs out midway.
    ///
    /// # Returns
    /// `None` once the generator has nothing left to give.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Draws exactly `n` values, sampling as many times as needed.
    ///
    /// # Returns
    /// `None` if the generator is exhausted before `n` values were drawn.
    fn take_exact(&mut self, n: usize) -> Option<Vec<f32>> {
        let mut values = Vec::with_capacity(n);

        while values.len() < n {
            values.extend(self.sample(n - values.len())?);
        }

        Some(values)
    }
}
