pub mod aws_sse;
pub mod sse;
