use std::fs;

use anyhow::Context;

use crate::{flags, script};

impl flags::Check {
    pub fn run(self) -> anyhow::Result<()> {
        let text = fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let script = script::read(&self.script)?;
        let before = text.len();
        let mut scratch = text;
        script::run(&script, &mut scratch).with_context(|| {
            format!(
                "script {} does not apply to {}",
                self.script.display(),
                self.file.display()
            )
        })?;
        println!(
            "ok: {} applies to {} ({before} -> {} bytes)",
            self.script.display(),
            self.file.display(),
            scratch.len()
        );
        Ok(())
    }
}
