//! Plans command implementation.

use tessera_lib::prelude::*;

/// Print every plan tier with its request budget and dispatch spacing.
pub(crate) fn list_plans(current: PlanTier) {
    println!("{:<10} {:>8} {:>12}", "PLAN", "REQ/MIN", "SPACING");
    println!("{}", "-".repeat(32));

    for plan in PlanTier::all() {
        let marker = if *plan == current { " *" } else { "" };
        println!(
            "{:<10} {:>8} {:>10}ms{}",
            plan.as_str(),
            plan.requests_per_minute(),
            plan.min_interval_ms(),
            marker
        );
    }

    println!("\n* configured plan");
}
