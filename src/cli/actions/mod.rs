pub mod server;

mod run;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
}

impl Action {
    /// Run the action to completion.
    ///
    /// # Errors
    /// Returns whatever error the action fails with.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
