mod model_test;
mod parsing_test;
