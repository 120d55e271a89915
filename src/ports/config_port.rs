//! Configuration access port trait.

/// Sectioned key/value configuration source.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    /// Keys present in `section`, in no particular order.
    fn keys(&self, section: &str) -> Vec<String>;
}
