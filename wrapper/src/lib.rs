pub mod env;
pub mod wrapper;

pub use env::{Env, EnvMetadata, RenderMode, RenderOutput, Step};
pub use wrapper::{Rendered, VideoStreamingWrapper};
