mod common;
mod test_joint;
mod test_pipeline;
mod test_progress;
