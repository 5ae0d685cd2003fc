mod endpoint_tests;
mod errors;
