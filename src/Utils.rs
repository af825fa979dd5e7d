//! different utility modules used throughout the project
/// logger initialization and saving of fields into csv files
pub mod logger;
/// parse document with structure like " title1 key1: value1, value2 key2: value2 title2 key3:value3, value4" into a map
pub mod task_parser;
///
mod task_parser_tests;
