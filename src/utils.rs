/// Group numeric digits to facilitate reading long numbers
pub fn group_digits<F: std::fmt::Display>(n: F) -> String {
    use numsep::{separate, Locale};
    separate(n, Locale::English)
}

/// Parse `"x,y,z"` into three values
#[allow(clippy::many_single_char_names)]
pub fn parse_triplet<T: std::str::FromStr>(s: &str) -> Result<[T; 3], String>
where
    T::Err: std::fmt::Display,
{
    let v = s.split(',').map(str::trim).collect::<Vec<_>>();
    if v.len() != 3 {
        return Err(format!("expected three comma-separated values, got `{s}`"));
    }
    let parse = |x: &str| x.parse::<T>().map_err(|e| format!("`{x}`: {e}"));
    Ok([parse(v[0])?, parse(v[1])?, parse(v[2])?])
}

pub mod timing {

    use super::group_digits;
    use std::io::Write;
    use std::time::{Duration, Instant};

    /// Wall-clock time spent in the consecutive stages of a run.
    ///
    /// Each stage is announced on stdout when it starts; its duration is
    /// printed on the same line when the next stage starts or on `finish`.
    #[derive(Default)]
    pub struct Stages {
        current: Option<(String, Instant)>,
        finished: Vec<(String, Duration)>,
    }

    impl Stages {
        pub fn new() -> Self { Self::default() }

        pub fn start(&mut self, stage: impl Into<String>) {
            self.close();
            let stage = stage.into();
            print!("{stage} ... ");
            // A failed flush only delays the message
            std::io::stdout().flush().ok();
            self.current = Some((stage, Instant::now()));
        }

        fn close(&mut self) {
            if let Some((stage, started)) = self.current.take() {
                let elapsed = started.elapsed();
                println!("{} ms", group_digits(elapsed.as_millis()));
                self.finished.push((stage, elapsed));
            }
        }

        /// Close the running stage and return all recorded durations
        pub fn finish(mut self) -> Vec<(String, Duration)> {
            self.close();
            self.finished
        }
    }
}
