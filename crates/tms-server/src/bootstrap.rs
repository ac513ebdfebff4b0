//! First-run setup: an organization and its first staff user.

use tms_core::error::TmsResult;
use tms_core::models::organization::{CreateOrganization, Organization, OrganizationType};
use tms_core::models::user::{CreateUser, User};
use tms_core::repository::{OrganizationRepository, UserRepository};
use tms_core::validation::ValidationErrors;
use tracing::info;

use crate::config::BootstrapArgs;
use crate::state::AppState;

/// Create the organization and a staff user able to log in.
pub async fn run(state: &AppState, args: BootstrapArgs) -> TmsResult<(Organization, User)> {
    let organization = CreateOrganization {
        name: args.organization_name,
        scac_code: args.scac_code,
        dot_number: None,
        org_type: OrganizationType::default(),
        timezone: "America/New_York".into(),
        currency: "USD".into(),
        token_expiration_days: None,
    };
    let mut errors = ValidationErrors::new();
    if let Err(e) = organization.validate() {
        errors.merge(e);
    }
    if let Err(e) = tms_auth::password::check_password_policy(
        &args.password,
        state.auth.config().min_password_length,
        "password",
    ) {
        errors.merge(e);
    }
    errors.into_result()?;

    let organization = state.organizations().create(organization).await?;

    let user = CreateUser {
        organization_id: organization.id,
        username: args.username,
        email: args.email,
        password: args.password,
        first_name: String::new(),
        last_name: String::new(),
        job_title_id: None,
        is_staff: true,
    };
    user.validate()?;
    let user = state.users().create(user).await?;

    info!(
        organization_id = %organization.id,
        user_id = %user.id,
        username = %user.username,
        "Bootstrap complete"
    );
    Ok((organization, user))
}
