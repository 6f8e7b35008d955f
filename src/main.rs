use gander::prelude::*;

fn main() {
    let metrics = match GanderAttack::initialize().and_then(|attack| attack.execute()) {
        Ok(metrics) => metrics,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    // Unexpected outcomes and a slow p95 fail the run.
    if let Err(e) = metrics.check() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
