use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use crate::{
    error::{AppError, AppResult},
    models::HashedPassword,
};

/// HashingParams
///
/// Argon2id work factors. Defaults follow the argon2 crate's recommended values;
/// tests and local runs may lower them through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// CredentialService
///
/// Salts and hashes plaintext passwords, and verifies a plaintext password against
/// a stored salt + digest pair.
///
/// Constructed once at start-up and handed to the User Store; cloning is cheap.
/// All methods are synchronous and CPU bound; async callers should run them on
/// the blocking pool.
#[derive(Debug, Clone)]
pub struct CredentialService {
    params: Params,
    // Digest used to burn a verification when no account matches an email.
    decoy: HashedPassword,
}

impl CredentialService {
    pub fn new(hashing: HashingParams) -> AppResult<Self> {
        let params = Params::new(
            hashing.memory_kib,
            hashing.iterations,
            hashing.parallelism,
            None,
        )
        .map_err(|e| AppError::Internal(format!("invalid argon2 parameters: {e}")))?;

        let mut service = Self {
            params,
            decoy: HashedPassword::default(),
        };
        service.decoy = service.salt_and_hash_pw("decoy-password-never-matches")?;
        Ok(service)
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// salt_and_hash_pw
    ///
    /// Generates a fresh salt from the OS CSPRNG and returns it together with the
    /// Argon2id digest of `plaintext_password` under that salt. Two calls with the
    /// same input never produce the same pair.
    pub fn salt_and_hash_pw(&self, plaintext_password: &str) -> AppResult<HashedPassword> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .hasher()
            .hash_password(plaintext_password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

        Ok(HashedPassword {
            salt: salt.as_str().to_string(),
            password: digest.to_string(),
        })
    }

    /// verify_password
    ///
    /// Recomputes the digest of `password` with the stored salt and compares it in
    /// constant time against `hashed_pw`.
    ///
    /// Returns `Ok(false)` on a mismatch. Errors only when the stored state itself is
    /// malformed: an unparseable digest, or a digest whose salt is not `salt`.
    pub fn verify_password(&self, password: &str, salt: &str, hashed_pw: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hashed_pw).map_err(|e| AppError::Credential(e.to_string()))?;

        let digest_salt = parsed
            .salt
            .ok_or_else(|| AppError::Credential("digest carries no salt".to_string()))?;
        if digest_salt.as_str() != salt {
            return Err(AppError::Credential(
                "stored salt does not match the digest".to_string(),
            ));
        }

        // Cost parameters are read back from the digest, so accounts hashed under
        // older work factors still verify.
        match self.hasher().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::Credential(e.to_string())),
        }
    }

    /// Runs a full verification against a decoy digest and discards the outcome.
    pub fn burn_verification(&self, password: &str) {
        let _ = self.verify_password(password, &self.decoy.salt, &self.decoy.password);
    }
}
