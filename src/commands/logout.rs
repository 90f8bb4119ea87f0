use crate::auth::Authenticator;
use crate::errors::report;
use crate::output;
use crate::store::CredentialStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let store = CredentialStore::select();
    let auth = Authenticator::new(store);

    let user = match auth.current_user() {
        Ok(user) => user,
        Err(err) => return Err(report(&err.to_string())),
    };

    // Revocation is best effort: a token the server no longer accepts
    // must still be removable locally.
    if let Some(refresh_token) = &user.refresh_token
        && let Err(err) = auth.revoke_refresh_token(refresh_token).await
    {
        output::warning(&format!("Could not revoke the refresh token: {}", err));
    }

    auth.store()
        .remove(auth.tenant())
        .map_err(|err| report(&err.to_string()))?;

    output::success("You are now logged out.");
    Ok(())
}
