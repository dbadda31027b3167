use crate::auth::TokenGenerator;

/// Mints a token for `user_id` and prints the lines to paste into its
/// `[[users]]` entry. Nothing is written anywhere.
pub fn run_admin_token(user_id: &str) -> anyhow::Result<()> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        anyhow::bail!("--user cannot be empty");
    }

    let issued = TokenGenerator::new().issue(user_id)?;

    println!();
    println!("========================================");
    println!("Token for '{user_id}' (save this, it won't be shown again):");
    println!();
    println!("  {}", issued.raw);
    println!();
    println!("Add to the [[users]] entry with id = \"{user_id}\":");
    println!();
    println!("token_lookup = \"{}\"", issued.credential.token_lookup);
    println!("token_hash = \"{}\"", issued.credential.token_hash);
    println!("========================================");
    println!();

    Ok(())
}
