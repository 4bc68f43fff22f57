mod algebra_tests;
mod run_container_tests;
