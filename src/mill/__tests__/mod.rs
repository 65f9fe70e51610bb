mod chunking_test;
mod escape_test;
