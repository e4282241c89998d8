mod path_tests;
mod refs_tests;
