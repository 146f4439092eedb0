// Data models for drift requests, pose keypoints, assessments and responses

pub mod assessment;
pub mod pose;
pub mod request;
pub mod response;
