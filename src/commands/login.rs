use tokio_util::sync::CancellationToken;

use crate::auth::{AuthStatus, Authenticator};
use crate::errors::report;
use crate::output;
use crate::store::CredentialStore;

pub async fn run(cancel: &CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
    let store = CredentialStore::select();
    let auth = Authenticator::new(store);

    // Skip the device flow entirely for a still-valid login.
    if let Ok(user) = auth.current_user()
        && matches!(user.check(), Ok(AuthStatus::Valid))
    {
        output::success("You are already logged in.");
        return Ok(());
    }

    let device_code = auth
        .start_device_flow()
        .await
        .map_err(|err| report(&err.to_string()))?;

    output::section("Log in to Numerous");
    output::step(&format!(
        "Open {} in your browser",
        output::emphasized(&device_code.verification_uri_complete)
    ));
    output::step(&format!(
        "Confirm that the page shows the code {}",
        output::emphasized(&device_code.user_code)
    ));
    output::muted(&format!(
        "The code expires in {} minutes.",
        device_code.expires_in / 60
    ));

    let tokens = auth
        .poll_for_tokens(&device_code, cancel)
        .await
        .map_err(|err| report(&err.to_string()))?;

    auth.store()
        .store_both(auth.tenant(), &tokens.access_token, &tokens.refresh_token)
        .map_err(|err| report(&err.to_string()))?;

    output::success("You are now logged in.");
    output::muted(&format!(
        "The access token is valid until {}.",
        tokens.expires_at.format("%Y-%m-%d %H:%M UTC")
    ));
    Ok(())
}
