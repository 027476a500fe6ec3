/// # Constants with reserved meanings in Kiln

/// Name of the single input tensor handed to a session
pub const INPUT_NAME: &str = "input";

/// Name of the output tensor a session is expected to produce
pub const OUTPUT_NAME: &str = "output";
