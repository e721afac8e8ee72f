mod input;
mod role;

pub use input::{InputCaptureState, InputGate, LifecycleEvent};
pub use role::{Session, SessionRole};
