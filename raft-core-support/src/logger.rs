use slog::{Drain, Logger};

/// The default, async, term-formatted root logger every node builds its
/// per-role child loggers from (`self.role.logger` in the candidate/leader/
/// follower states is `get_root_logger().new(o!("role" => ...))`).
pub fn get_root_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}
