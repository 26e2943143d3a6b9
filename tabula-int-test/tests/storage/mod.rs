mod storage_test;
