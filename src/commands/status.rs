use crate::auth::{AuthError, AuthStatus, Authenticator};
use crate::errors::report;
use crate::output;
use crate::store::CredentialStore;

/// Report the local login state. Purely offline; no token refresh.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let store = CredentialStore::select();
    let auth = Authenticator::new(store);

    let user = match auth.current_user() {
        Ok(user) => user,
        Err(AuthError::UserNotLoggedIn) => {
            output::step("You are not logged in. Run 'numerous login' to log in.");
            return Ok(());
        }
        Err(err) => return Err(report(&err.to_string())),
    };

    match user.check() {
        Ok(AuthStatus::Valid) => {
            output::success(&format!(
                "Logged in to tenant {}.",
                output::emphasized(&user.tenant)
            ));
        }
        Ok(AuthStatus::Expired) => {
            output::warning(
                "Your access token has expired. It will be refreshed on the next command, or log in again.",
            );
        }
        Err(err) => return Err(report(&err.to_string())),
    }

    Ok(())
}
