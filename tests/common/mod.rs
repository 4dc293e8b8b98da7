pub mod fixture;
pub use fixture::Fixture;

/// Compare the contents of an obtained output file against an expected string.
#[macro_export]
macro_rules! validate_file {
    ($obtained_file:expr, $want:expr) => {
        let got = std::fs::read_to_string(&$obtained_file)
            .unwrap_or_else(|_| panic!("Failed to open {:?}", $obtained_file));
        assert_eq!($want, got)
    };
}
