fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Non-interactive TUI smoke test mode (for automated checks).
    // Renders a single frame for a specific screen and exits 0.
    // Usage: --tui-smoke or --tui-smoke=index|check|connect|database|owner|import|complete|login|dashboard|create-user
    if let Some(arg) = args
        .iter()
        .find(|a| a.as_str() == "--tui-smoke" || a.starts_with("--tui-smoke="))
    {
        let target = arg
            .split_once('=')
            .map(|(_, v)| v.to_string())
            .filter(|v| !v.trim().is_empty());
        if let Err(e) = pm_setup::run_tui_smoke(target) {
            eprintln!("pm-setup error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // One-shot engine status query. Exits 0 when MySQL is installed and running.
    if args.iter().any(|a| a == "--check-engine") {
        match pm_setup::run_engine_check() {
            Ok(code) => std::process::exit(code),
            Err(e) => {
                eprintln!("pm-setup error: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = pm_setup::run_tui() {
        eprintln!("pm-setup error: {:#}", e);
        std::process::exit(1);
    }
}
