use std::panic;

use log::error;

/// Install the panic hook: verbose backtraces in debug builds, a crash report otherwise
pub fn initialize_panic_handler() {
    #[cfg(debug_assertions)]
    better_panic::install();

    #[cfg(not(debug_assertions))]
    human_panic::setup_panic!();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("Panic: {panic_info}");
        log::logger().flush();
        default_hook(panic_info);
    }));
}
