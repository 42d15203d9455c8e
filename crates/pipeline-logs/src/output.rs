//! Where headers, log lines and upstream failures are written.

use colored::Colorize;

use crate::readiness::UpstreamFailure;

/// Identifies the unit whose log follows
#[derive(Debug, Clone, Copy)]
pub struct UnitHeader<'a> {
    pub build: &'a str,
    pub stage: Option<&'a str>,
    pub pod: &'a str,
    pub container: &'a str,
}

/// Receives the output of a follow, in order.
pub trait LogSink: Send {
    /// Start of a build's logs.
    fn build(&mut self, title: &str);

    /// Start of one container's log.
    fn unit(&mut self, header: &UnitHeader<'_>);

    /// One log line.
    fn line(&mut self, line: &str);

    /// A previous container exited non-zero.
    fn upstream_failure(&mut self, failure: &UpstreamFailure);
}

/// Writes to the terminal
#[derive(Debug, Default)]
pub struct TerminalSink;

#[allow(clippy::disallowed_macros)]
impl LogSink for TerminalSink {
    fn build(&mut self, title: &str) {
        println!("Build logs for {}", title.cyan());
    }

    fn unit(&mut self, header: &UnitHeader<'_>) {
        match header.stage {
            Some(stage) => println!(
                "getting the log for build {} stage {} and init container {}",
                header.build.cyan(),
                stage.cyan(),
                header.container.cyan()
            ),
            None => println!(
                "getting the log for pod {} and init container {}",
                header.pod.cyan(),
                header.container.cyan()
            ),
        }
    }

    fn line(&mut self, line: &str) {
        println!("{line}");
    }

    fn upstream_failure(&mut self, failure: &UpstreamFailure) {
        let message = failure.message.as_deref().unwrap_or_default();
        println!(
            "{}",
            format!(
                "container {} failed with exit code {}: {}",
                failure.container, failure.exit_code, message
            )
            .yellow()
        );
    }
}
