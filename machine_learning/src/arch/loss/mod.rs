mod cross_entropy;
mod loss_fn;

pub use cross_entropy::{CrossEntropy, softmax};
pub use loss_fn::LossFn;
