use super::ParamGen;

/// Runs several parameter generators back to back, moving on to the next one once the current
/// one is exhausted.
///
/// Each dense layer wants weights and biases drawn from a range that depends on its own fan-in,
/// so the model builds one generator per parameter segment and chains them in layout order.
pub struct ChainedParamGen {
    param_gens: Vec<Box<dyn ParamGen>>,
    curr: usize,
}

impl ChainedParamGen {
    pub fn new(param_gens: Vec<Box<dyn ParamGen>>) -> Self {
        Self {
            param_gens,
            curr: 0,
        }
    }
}

impl ParamGen for ChainedParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let mut values = Vec::with_capacity(n);

        while values.len() < n {
            let param_gen = self.param_gens.get_mut(self.curr)?;

            match param_gen.sample(n - values.len()) {
                Some(sample) if !sample.is_empty() => values.extend(sample),
                _ => self.curr += 1,
            }

            if self.curr == self.param_gens.len() {
                break;
            }
        }

        (!values.is_empty() || n == 0).then_some(values)
    }
}
