mod package_tests;
