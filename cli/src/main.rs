use std::process::exit;

mod apply;
mod check;
mod flags;
mod script;

fn wrapped_main() -> anyhow::Result<()> {
    let flags = flags::Quilt::from_env_or_exit();
    match flags.subcommand {
        flags::QuiltCmd::Apply(apply_cmd) => apply_cmd.run(),
        flags::QuiltCmd::Check(check_cmd) => check_cmd.run(),
    }
}

pub fn main() {
    if let Err(err) = wrapped_main() {
        for error in err.chain() {
            eprintln!("error: {error}")
        }
        exit(1)
    }
}
