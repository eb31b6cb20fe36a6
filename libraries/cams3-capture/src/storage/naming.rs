//! Generated file names: `/<PREFIX>_<millis>_<counter>.<ext>`

/// Per-process name counter.
///
/// The counter starts at 1 and is bumped before every name, so two names from the
/// same generator never collide. It is not persisted; after a restart the
/// timestamp part is what keeps names apart.
#[derive(Debug, Default, Clone)]
pub struct NameGenerator {
    counter: u64,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose the next name for `prefix`/`extension` at time `millis`
    pub fn next(&mut self, prefix: &str, extension: &str, millis: u64) -> String {
        self.counter += 1;
        let extension = extension.trim_start_matches('.');
        format!("/{prefix}_{millis}_{}.{extension}", self.counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let mut names = NameGenerator::new();
        assert_eq!(names.next("IMG", "jpg", 1234), "/IMG_1234_1.jpg");
        assert_eq!(names.next("REC", ".wav", 1234), "/REC_1234_2.wav");
    }

    #[test]
    fn test_same_millis_still_unique() {
        let mut names = NameGenerator::new();
        let a = names.next("IMG", "jpg", 0);
        let b = names.next("IMG", "jpg", 0);
        assert_ne!(a, b);
    }
}
