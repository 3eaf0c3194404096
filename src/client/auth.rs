//! Two-step signup, login and logout against the session store.

use super::session::{Session, SessionStore, Storage};
use crate::error::ApiError;
use crate::models::{AuthResponse, LoginRequest, SignupRequest};
use crate::services::backend::Backend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MIN_PASSWORD_CHARS: usize = 8;

macro_rules! choice {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $value:literal, $label:literal, $description:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $value)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire value sent to the backend.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn description(self) -> &'static str {
                match self {
                    $($name::$variant => $description,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = AuthError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw.trim() {
                    "" => Err(AuthError::Missing($field)),
                    $($value => Ok($name::$variant),)+
                    other => Err(AuthError::InvalidChoice {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice! {
    ProgrammingExperience, "programming experience" {
        Beginner => "beginner", "Beginner", "New to programming";
        Intermediate => "intermediate", "Intermediate", "Comfortable with Python";
        Advanced => "advanced", "Advanced", "Professional developer";
    }
}

choice! {
    HardwareExperience, "hardware experience" {
        Never => "none", "None", "Never worked with hardware";
        Hobbyist => "some", "Some", "Arduino, Raspberry Pi, etc.";
        Professional => "extensive", "Extensive", "Professional robotics experience";
    }
}

choice! {
    PrimaryInterest, "primary interest" {
        Ros2 => "ros2", "ROS 2 Development", "Nodes, topics, packages";
        Simulation => "simulation", "Robot Simulation", "Gazebo, Unity, Isaac Sim";
        Ai => "ai", "AI & Machine Learning", "Perception, planning, VLA models";
        All => "all", "All Topics", "The whole course";
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please enter your {0}.")]
    Missing(&'static str),
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Password must be at least 8 characters.")]
    PasswordTooShort,
    #[error("\"{value}\" is not a valid {field}.")]
    InvalidChoice { field: &'static str, value: String },
    #[error("Please complete the account details first.")]
    WrongStep,
    #[error("A request is already in progress.")]
    Busy,
    /// The backend said no; carries its `detail` or a generic message.
    #[error("{0}")]
    Rejected(String),
    #[error("Connection error. Please try again.")]
    Connection,
    #[error("could not save the session")]
    Storage(#[source] anyhow::Error),
}

impl AuthError {
    pub(crate) fn from_backend(err: ApiError, fallback: &str) -> Self {
        match err {
            ApiError::Connection(_) => AuthError::Connection,
            ApiError::Validation(message) => AuthError::Rejected(message),
            err => AuthError::Rejected(err.upstream_detail().unwrap_or_else(|| fallback.to_string())),
        }
    }
}

/// Name and email from step one; safe to echo back into a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

impl Contact {
    pub fn parse(name: &str, email: &str) -> Result<Self, AuthError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(AuthError::Missing("full name"));
        }
        if email.is_empty() {
            return Err(AuthError::Missing("email address"));
        }
        if !is_plausible_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        Ok(Contact {
            name: name.to_string(),
            email: email.to_string(),
        })
    }
}

/// Step one of signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Account {
    pub fn parse(name: &str, email: &str, password: &str) -> Result<Self, AuthError> {
        Self::with_password(Contact::parse(name, email)?, password)
    }

    pub fn with_password(contact: Contact, password: &str) -> Result<Self, AuthError> {
        if password.is_empty() {
            return Err(AuthError::Missing("password"));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::PasswordTooShort);
        }
        Ok(Account {
            name: contact.name,
            email: contact.email,
            password: password.to_string(),
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

/// Step two of signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background {
    pub programming_experience: ProgrammingExperience,
    pub hardware_experience: HardwareExperience,
    pub primary_interest: PrimaryInterest,
}

impl Background {
    pub fn parse(programming: &str, hardware: &str, interest: &str) -> Result<Self, AuthError> {
        Ok(Background {
            programming_experience: programming.parse()?,
            hardware_experience: hardware.parse()?,
            primary_interest: interest.parse()?,
        })
    }
}

pub fn signup_request(account: &Account, background: &Background) -> SignupRequest {
    SignupRequest {
        name: account.name.clone(),
        email: account.email.clone(),
        password: account.password.clone(),
        programming_experience: background.programming_experience.as_str().to_string(),
        hardware_experience: background.hardware_experience.as_str().to_string(),
        primary_interest: background.primary_interest.as_str().to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupStep {
    Account,
    Background,
    Submitting,
    Done,
}

/// The signup wizard. The last error stays visible until the next action.
#[derive(Debug)]
pub struct SignupForm {
    step: SignupStep,
    account: Option<Account>,
    error: Option<String>,
}

impl Default for SignupForm {
    fn default() -> Self {
        Self::new()
    }
}

impl SignupForm {
    pub fn new() -> Self {
        SignupForm {
            step: SignupStep::Account,
            account: None,
            error: None,
        }
    }

    pub fn step(&self) -> SignupStep {
        self.step
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn submit_account(&mut self, name: &str, email: &str, password: &str) -> Result<(), AuthError> {
        if self.step != SignupStep::Account {
            return Err(AuthError::WrongStep);
        }
        let account = self.record(Account::parse(name, email, password))?;
        self.account = Some(account);
        self.step = SignupStep::Background;
        Ok(())
    }

    /// Returns to the account step; entered details are kept.
    pub fn back(&mut self) {
        if self.step == SignupStep::Background {
            self.step = SignupStep::Account;
            self.error = None;
        }
    }

    pub fn submit_background(&mut self, background: Background) -> Result<SignupRequest, AuthError> {
        match (self.step, &self.account) {
            (SignupStep::Background, Some(account)) => {
                let request = signup_request(account, &background);
                self.step = SignupStep::Submitting;
                self.error = None;
                Ok(request)
            }
            (SignupStep::Submitting, _) => Err(AuthError::Busy),
            _ => Err(AuthError::WrongStep),
        }
    }

    /// Applies the backend's answer. On failure the form returns to the
    /// background step so the reader can retry.
    pub fn complete<S: Storage>(
        &mut self,
        store: &mut SessionStore<S>,
        result: Result<AuthResponse, ApiError>,
    ) -> Result<Session, AuthError> {
        if self.step != SignupStep::Submitting {
            return Err(AuthError::WrongStep);
        }
        let outcome = result
            .map_err(|err| AuthError::from_backend(err, "Signup failed"))
            .and_then(|response| persist(store, response));
        self.step = match outcome {
            Ok(_) => SignupStep::Done,
            Err(_) => SignupStep::Background,
        };
        self.record(outcome)
    }

    pub async fn submit<B: Backend, S: Storage>(
        &mut self,
        backend: &B,
        store: &mut SessionStore<S>,
        background: Background,
    ) -> Result<Session, AuthError> {
        let request = self.submit_background(background)?;
        let result = backend.signup(&request).await;
        self.complete(store, result)
    }

    fn record<T>(&mut self, result: Result<T, AuthError>) -> Result<T, AuthError> {
        self.error = result.as_ref().err().map(ToString::to_string);
        result
    }
}

fn persist<S: Storage>(store: &mut SessionStore<S>, response: AuthResponse) -> Result<Session, AuthError> {
    let session = Session {
        token: response.token,
        user: response.user,
    };
    store.set(session.clone()).map_err(AuthError::Storage)?;
    Ok(session)
}

pub async fn sign_in<B: Backend, S: Storage>(
    backend: &B,
    store: &mut SessionStore<S>,
    email: &str,
    password: &str,
) -> Result<Session, AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::Missing("email address"));
    }
    if password.is_empty() {
        return Err(AuthError::Missing("password"));
    }
    let request = LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    };
    let response = backend
        .login(&request)
        .await
        .map_err(|err| AuthError::from_backend(err, "Login failed"))?;
    persist(store, response)
}

pub fn sign_out<S: Storage>(store: &mut SessionStore<S>) -> Result<(), AuthError> {
    store.clear().map_err(AuthError::Storage)
}
