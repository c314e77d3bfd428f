//! Controller names understood by the router

pub const LTE_SMS_RECVMSGBOX: &str = "LTE_SMS_RECVMSGBOX";
pub const LTE_SMS_RECVMSGENTRY: &str = "LTE_SMS_RECVMSGENTRY";
pub const LTE_SMS_UNREADMSGENTRY: &str = "LTE_SMS_UNREADMSGENTRY";
pub const LTE_SMS_SENDMSGBOX: &str = "LTE_SMS_SENDMSGBOX";
pub const LTE_SMS_SENDMSGENTRY: &str = "LTE_SMS_SENDMSGENTRY";
pub const LTE_SMS_SENDNEWMSG: &str = "LTE_SMS_SENDNEWMSG";

/// CGI action ending the web session
pub const CGI_LOGOUT: &str = "/cgi/logout";
