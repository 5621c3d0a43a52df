use std::fs;

use anyhow::Context;

use crate::{flags, script};

impl flags::Apply {
    pub fn run(self) -> anyhow::Result<()> {
        let mut text = fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let script = script::read(&self.script)?;
        let inverse = script::run(&script, &mut text).with_context(|| {
            format!(
                "failed to apply {} to {}",
                self.script.display(),
                self.file.display()
            )
        })?;
        if let Some(undo) = &self.undo {
            script::write(undo, &inverse)?;
        }
        if self.in_place {
            fs::write(&self.file, &text)
                .with_context(|| format!("failed to write {}", self.file.display()))?;
        } else {
            print!("{text}");
        }
        Ok(())
    }
}
