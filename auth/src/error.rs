use thiserror::Error;

/// Error codes reported by the sign-in provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    EmailAlreadyInUse,
    InvalidEmail,
    UserNotFound,
    WrongPassword,
    WeakPassword,
    PopupClosedByUser,
    CancelledPopupRequest,
    InvalidCredential,
    Other,
}

impl AuthErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorCode::EmailAlreadyInUse => "auth/email-already-in-use",
            AuthErrorCode::InvalidEmail => "auth/invalid-email",
            AuthErrorCode::UserNotFound => "auth/user-not-found",
            AuthErrorCode::WrongPassword => "auth/wrong-password",
            AuthErrorCode::WeakPassword => "auth/weak-password",
            AuthErrorCode::PopupClosedByUser => "auth/popup-closed-by-user",
            AuthErrorCode::CancelledPopupRequest => "auth/cancelled-popup-request",
            AuthErrorCode::InvalidCredential => "auth/invalid-credential",
            AuthErrorCode::Other => "auth/internal-error",
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "auth/email-already-in-use" => AuthErrorCode::EmailAlreadyInUse,
            "auth/invalid-email" => AuthErrorCode::InvalidEmail,
            "auth/user-not-found" => AuthErrorCode::UserNotFound,
            "auth/wrong-password" => AuthErrorCode::WrongPassword,
            "auth/weak-password" => AuthErrorCode::WeakPassword,
            "auth/popup-closed-by-user" => AuthErrorCode::PopupClosedByUser,
            "auth/cancelled-popup-request" => AuthErrorCode::CancelledPopupRequest,
            "auth/invalid-credential" => AuthErrorCode::InvalidCredential,
            _ => AuthErrorCode::Other,
        }
    }

    /// Text shown to the user for this code.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthErrorCode::EmailAlreadyInUse => "This email is already registered. Try logging in.",
            AuthErrorCode::InvalidEmail => "Please enter a valid email address.",
            AuthErrorCode::UserNotFound => "No account found with this email.",
            AuthErrorCode::WrongPassword => "Incorrect password. Please try again.",
            AuthErrorCode::WeakPassword => "Password should be at least 6 characters.",
            AuthErrorCode::PopupClosedByUser => "Sign-in popup was closed before finishing.",
            AuthErrorCode::CancelledPopupRequest => "Sign-in was interrupted. Try again.",
            AuthErrorCode::InvalidCredential => {
                "Your login credentials are invalid. Please check your email and password."
            }
            AuthErrorCode::Other => "Something went wrong. Please try again.",
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{}", .0.user_message())]
    Provider(AuthErrorCode),
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Please log in to continue.")]
    NotSignedIn,
    #[error("{0} sign-in is not configured")]
    NotConfigured(&'static str),
    #[error("OAuth Error: {0}")]
    OAuth(String),
    #[error("Storage Error: {0}")]
    Storage(String),
}

impl AuthError {
    pub fn code(&self) -> Option<AuthErrorCode> {
        match self {
            AuthError::Provider(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<AuthErrorCode> for AuthError {
    fn from(code: AuthErrorCode) -> Self {
        AuthError::Provider(code)
    }
}
