use crate::{
    command::{CommandOutput, CommandRunner},
    config::ServiceConfig,
    error::Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    AlreadyEnabled,
    Enabled,
}

/// The bootpd launchd job.
#[derive(Debug)]
pub struct Service<R> {
    runner: R,
    config: ServiceConfig,
}

impl<R: CommandRunner> Service<R> {
    pub fn new(runner: R, config: ServiceConfig) -> Self {
        Self { runner, config }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub async fn is_running(&self) -> Result<bool, Error> {
        let output = self
            .runner
            .output("pgrep", &[self.config.process_name.as_str()])
            .await?;
        Ok(output.success() && !output.stdout.trim().is_empty())
    }

    pub async fn start(&self) -> Result<(), Error> {
        let plist = self.config.launchd_plist.to_string_lossy();
        self.launchctl(&["load", "-w", &*plist]).await?;
        tracing::info!("loaded {}", self.config.label);
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), Error> {
        let plist = self.config.launchd_plist.to_string_lossy();
        self.launchctl(&["unload", &*plist]).await?;
        tracing::info!("unloaded {}", self.config.label);
        Ok(())
    }

    pub async fn restart(&self) -> Result<(), Error> {
        self.stop().await?;
        // give launchd a moment to tear the job down
        tokio::time::sleep(self.config.restart_delay).await;
        self.start().await
    }

    /// Makes sure bootpd is registered to start at boot, loading it with
    /// `-w` when `launchctl list` does not know about it.
    pub async fn ensure_startup(&self) -> Result<Startup, Error> {
        let plist = &self.config.launchd_plist;
        let exists = tokio::fs::try_exists(plist)
            .await
            .map_err(|e| Error::io(plist, e))?;
        if !exists {
            return Err(Error::NotFound {
                path: plist.clone(),
            });
        }

        let (program, args) = self.privileged(&["list", self.config.label.as_str()]);
        let listing = self.runner.output(program, &args).await?;
        if listing.stdout.contains(&self.config.label) {
            return Ok(Startup::AlreadyEnabled);
        }

        tracing::info!("{} is not registered with launchd", self.config.label);
        self.start().await?;
        Ok(Startup::Enabled)
    }

    async fn launchctl(&self, args: &[&str]) -> Result<CommandOutput, Error> {
        let (program, args) = self.privileged(args);
        self.runner.run(program, &args).await
    }

    fn privileged<'a>(&self, args: &[&'a str]) -> (&'static str, Vec<&'a str>) {
        if self.config.use_sudo {
            let args = std::iter::once("launchctl")
                .chain(args.iter().copied())
                .collect();
            ("sudo", args)
        } else {
            ("launchctl", args.to_vec())
        }
    }
}
