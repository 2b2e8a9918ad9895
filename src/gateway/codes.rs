//! Static PayFast response-code table.
//!
//! "00" is the sole success sentinel across every endpoint. Every component
//! consults this single table; descriptions are for end-user-facing flows,
//! machine-facing flows keep the raw code.

pub const SUCCESS: &str = "00";
pub const UNKNOWN_ERROR: &str = "Unknown Error Code";

/// Description for a provider response code, if the code is known.
pub fn describe(code: &str) -> Option<&'static str> {
    let description = match code {
        "00" => "Processed OK",
        "001" => "Pending",
        "002" => "Payfast Time out",
        "3" => "You have entered an Inactive Account",
        "13" => "You have entered an Invalid Amount",
        "14" => "Entered details are Incorrect",
        "15" => "Dear Customer, You have entered an In-Active Card number",
        "30" => "Account type is required",
        "41" => "Dear Customer, entered details are Mismatched",
        "42" => "Dear Customer, You have entered an invalid CNIC",
        "54" => "Card Expired",
        "55" => "You have entered an Invalid OTP/PIN",
        "75" => "Maximum PIN Retries has been exceeded",
        "79" => "Alternate Success response",
        "90" => "SSL is required. No SSL Found",
        "97" => "Dear Customer, you have an insufficient Balance to proceed",
        "106" => {
            "Dear Customer, Your transaction Limit has been exceeded please contact your bank"
        }
        "126" => "Dear Customer your provided Account details are Invalid",
        "401" => "You're not Authorized",
        "423" => {
            "Dear Customer, We are unable to process your request at the moment please try again later"
        }
        "801" => "{0} is your PayFast OTP (One Time Password). Please do not share with anyone.",
        "802" => "OTP could not be sent. Please try again later.",
        "803" => "OTP has been sent to your email address",
        "804" => "OTP has been sent to your mobile number",
        "805" => "OTP Verified",
        "806" => "OTP could not be verified",
        "807" => "Too many attempts. Please try again later in few minutes",
        "808" => "Passwords do not match",
        "809" => "Invalid Password",
        "810" => "Password could not be changed",
        "811" => "Password changed successfully",
        "812" => "Request could not be validated. Please try again",
        "813" => "Email address already registered",
        "850" => "OTP not required because issuer manages OTP itself.",
        "851" => "OTP required for permanent token",
        "9000" => "Rejected by FRMS",
        _ => return None,
    };
    Some(description)
}

/// Maps a provider code to a human-readable description and an
/// HTTP-equivalent status. Unknown codes get a distinct 406 status.
pub fn map_error_code(code: &str) -> (&'static str, u16) {
    match describe(code) {
        Some(description) => (description, 200),
        None => (UNKNOWN_ERROR, 406),
    }
}
