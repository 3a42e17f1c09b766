/// Gets the value of an environment variable, treating empty values as unset.
pub fn get_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_empty_env_is_unset() {
        std::env::set_var("ARGUS_TEST_EMPTY_ENV", "  ");
        assert_eq!(get_env("ARGUS_TEST_EMPTY_ENV"), None);
        std::env::remove_var("ARGUS_TEST_EMPTY_ENV");
    }
}
