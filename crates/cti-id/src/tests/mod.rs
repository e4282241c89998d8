mod identifier_tests;
