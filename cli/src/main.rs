// Placeholder binary. The CLI surface (config loading, run/replay commands)
// is out of scope for this repository; see rtgs_sim_core for the engine.
fn main() {}
