mod parsing_test;
mod table_test;
